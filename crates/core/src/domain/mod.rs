pub mod approval;
pub mod cache;
pub mod classification;
pub mod guest;
pub mod knowledge;
pub mod message;
pub mod response;
pub mod task;
