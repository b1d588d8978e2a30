pub mod detector;
pub mod dispatcher;
pub mod intake;
pub mod job_store;
pub mod reader;
pub mod storage;
