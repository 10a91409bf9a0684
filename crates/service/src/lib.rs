//! Service layer for the local record keeper.
//! - Persists through the `KvProvider` seam so file, memory, or any other backend can be swapped in.
//! - Contains storage and parse failures at this boundary; callers get values plus notices.

pub mod errors;
pub mod storage;
pub mod records;
pub mod photos;
pub mod autofill;
pub mod calculator;
pub mod workbook;
