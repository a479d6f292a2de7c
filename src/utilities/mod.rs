pub mod data_loader;
pub mod modular;
pub mod primes;
pub mod tetration;
