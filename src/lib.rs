pub mod config;
pub mod fetch;
pub mod pipeline;
pub mod process;
pub mod sales;
pub mod workitems;

#[cfg(test)]
mod test_support;
