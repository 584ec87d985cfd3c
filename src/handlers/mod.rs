pub mod health_handlers;
pub mod package_handlers;
pub mod package_rate_handlers;
pub mod storage_block_handlers;
