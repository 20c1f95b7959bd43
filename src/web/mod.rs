//! HTML surface of the parameter store.

pub mod form;

pub use form::FormPage;
