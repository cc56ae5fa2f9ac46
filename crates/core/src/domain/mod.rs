pub mod catalog;
pub mod quotation;
pub mod request;
pub mod validation;
