pub trait ParameterStore {
    /// Reads a parameter value, decrypting it when stored as a secure string.
    fn get_secure_parameter(&self, name: &str) -> Result<String, String>;
}
