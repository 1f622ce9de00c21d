pub mod jsonl;
pub mod retry;
pub mod time;
