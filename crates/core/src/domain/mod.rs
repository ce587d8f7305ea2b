pub mod call;
pub mod contact;
pub mod mapping;
pub mod note;
pub mod sync;
pub mod webhook;
