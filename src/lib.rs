//! Translates a restricted Python subset into Arduino C++ sketches.
//!
//! ```
//! let sketch = pyino::translate("def loop():\n    delay(500)\n").unwrap();
//! assert_eq!(sketch, "void loop() {\n    delay(500);\n}\n");
//! ```

use tracing::debug;

pub mod builtins;
pub mod codegen;
pub mod config;
pub mod error;
pub mod infer;
pub mod kind;
pub mod lexer;
pub mod parser;

pub use crate::config::{Config, ConfigError};
pub use crate::error::{Error, ErrorKind, Result};

use crate::builtins::CallTable;
use crate::codegen::CodeGenerator;

/// A configured translation pipeline. Holds only immutable state, so one
/// translator can serve any number of threads.
#[derive(Debug, Clone)]
pub struct Translator {
    config: Config,
    calls: CallTable,
}

impl Default for Translator {
    fn default() -> Self {
        Self {
            config: Config::default(),
            calls: CallTable::builtin(),
        }
    }
}

impl Translator {
    pub fn new(config: Config) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let mut calls = CallTable::builtin();
        calls.extend(&config.calls, &config.constants)?;
        Ok(Self { config, calls })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn translate(&self, source: &str) -> Result<String> {
        let tokens = lexer::tokenize(source)?;
        let mut program = parser::parse_tokens(tokens, source)?;
        infer::infer(&mut program, &self.calls)?;
        let output = CodeGenerator::new(&self.calls, self.config.indent_width, self.config.float_type)
            .generate(&program)?;
        debug!(
            input_lines = source.lines().count(),
            output_lines = output.lines().count(),
            "translated program"
        );
        Ok(output)
    }
}

/// Translates with the default configuration.
pub fn translate(source: &str) -> Result<String> {
    Translator::default().translate(source)
}
