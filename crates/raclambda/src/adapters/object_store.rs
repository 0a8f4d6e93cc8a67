pub trait ObjectFetcher {
    fn fetch_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, String>;
}
