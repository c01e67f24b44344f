//! 프로세스 전역 캐시.

pub mod symbols;

pub use symbols::{CacheStatus, SymbolCache, SymbolLookup, SymbolSource};
