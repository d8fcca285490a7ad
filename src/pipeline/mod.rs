pub mod config;
pub mod persistence;
pub mod scenes;

#[cfg(test)]
pub mod test_fixture;
