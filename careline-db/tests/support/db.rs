use careline_db::{Db, DbConfig};

pub fn test_db() -> Db {
    let config = DbConfig::from_env();
    Db::from_config(&config).expect("Failed to create database client")
}
