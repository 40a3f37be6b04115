pub mod callback;
pub mod retry;
pub mod storage;
