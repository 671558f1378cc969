pub mod locate;
pub mod status;
pub mod sync;
