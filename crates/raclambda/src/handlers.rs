pub mod cycle;
pub mod event;

#[cfg(test)]
mod test_support;
