pub mod chunk_accumulator;
pub mod silence_watchdog;
pub mod stream_layout;
pub mod stream_processor;
