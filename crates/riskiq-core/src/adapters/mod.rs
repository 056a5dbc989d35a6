mod memory;
mod yahoo;

pub use memory::InMemorySource;
pub use yahoo::YahooAdapter;
