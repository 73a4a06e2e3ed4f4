use std::collections::HashMap;

use crate::config::Config;

/// Configuration with dummy credentials and ids `db`, `posts`, `details`,
/// `images`.
pub fn test_config() -> Config {
    let env = HashMap::from([
        ("BIND_ADDR", "127.0.0.1:0"),
        ("APPWRITE_ENDPOINT", "http://appwrite.local/v1"),
        ("APPWRITE_PROJECT_ID", "proj"),
        ("APPWRITE_API_KEY", "key"),
        ("APPWRITE_DATABASE_ID", "db"),
        ("APPWRITE_POST_COLLECTION_ID", "posts"),
        ("APPWRITE_DETAILS_COLLECTION_ID", "details"),
        ("APPWRITE_STORAGE_BUCKET_ID", "images"),
        ("AWS_ACCESS_KEY_ID", "AKID"),
        ("AWS_SECRET_ACCESS_KEY", "SECRET"),
    ]);
    Config::from_lookup(|key| env.get(key).map(|v| v.to_string()))
        .expect("test configuration is valid")
}
