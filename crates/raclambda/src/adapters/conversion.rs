use std::path::PathBuf;

use raclambda_core::commands::{ConversionCommand, ProcessExit};

use crate::adapters::process::run_captured;

/// The black-box tool turning staged input files into outputs and dregs.
pub trait ConversionTool {
    fn invoke(&self, command: &ConversionCommand) -> Result<ProcessExit, String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RacBinary {
    pub binary: PathBuf,
}

impl RacBinary {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl ConversionTool for RacBinary {
    fn invoke(&self, command: &ConversionCommand) -> Result<ProcessExit, String> {
        run_captured("conversion_tool", &self.binary, &command.to_args())
    }
}
