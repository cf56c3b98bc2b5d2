pub mod alloc;
pub mod storage;
pub mod tuple;
pub mod varpage;
