pub mod list;
pub mod status;
pub mod sync;
pub mod watch;
