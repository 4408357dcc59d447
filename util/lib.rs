pub mod progress_counter;

pub use self::progress_counter::ProgressCounter;
