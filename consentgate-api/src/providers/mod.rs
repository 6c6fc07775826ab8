//! External Providers
//!
//! Clients for services the gate consumes over the network.

mod partner_validator;

pub use partner_validator::HttpPartnerValidator;
