//! Thin public facade over [`TinyLlamaModel`].
//!
//! All argument sanitization lives here: path existence and kind checks,
//! string length and NUL checks, numeric range checks. The engine below
//! assumes arguments have already been validated.

use std::io;
use std::path::{Path, PathBuf};

use crate::config::ModelConfig;
use crate::error::{Result, TinyLlamaError};
use crate::model::TinyLlamaModel;

const MAX_STRING_LENGTH: usize = 1_000_000;
const MAX_GENERATION_TOKENS: usize = 10_000;
const MAX_TOKEN_COUNT: usize = 100_000;
const MIN_TEMPERATURE: f32 = 0.01;
const MAX_TEMPERATURE: f32 = 1000.0;

fn validate_string_input(input: &str, param_name: &str, allow_empty: bool) -> Result<()> {
    if !allow_empty && input.is_empty() {
        return Err(TinyLlamaError::InvalidConfig(format!(
            "{} cannot be empty",
            param_name
        )));
    }
    if input.contains('\0') {
        return Err(TinyLlamaError::InvalidConfig(format!(
            "{} contains null characters",
            param_name
        )));
    }
    if input.len() > MAX_STRING_LENGTH {
        return Err(TinyLlamaError::InvalidConfig(format!(
            "{} is too long (max {} characters)",
            param_name, MAX_STRING_LENGTH
        )));
    }
    Ok(())
}

fn validate_file_path(path: &Path, param_name: &str) -> Result<()> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Err(TinyLlamaError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} is a directory, not a file: {}", param_name, path.display()),
        ))),
        Ok(_) => Ok(()),
        Err(_) => Err(TinyLlamaError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} does not exist: {}", param_name, path.display()),
        ))),
    }
}

fn validate_directory_path(path: &Path, param_name: &str) -> Result<()> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(TinyLlamaError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} is not a directory: {}", param_name, path.display()),
        ))),
        Err(_) => Err(TinyLlamaError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} does not exist: {}", param_name, path.display()),
        ))),
    }
}

/// Public interface for tokenization and text generation.
///
/// Non-reinitializable: a failed or repeated `initialize` leaves the
/// instance not ready; create a fresh instance instead.
pub struct TinyLlama {
    model: TinyLlamaModel,
    initialized: bool,
}

impl TinyLlama {
    pub fn new() -> Result<Self> {
        Ok(Self {
            model: TinyLlamaModel::new()?,
            initialized: false,
        })
    }

    pub fn with_config(config: ModelConfig) -> Result<Self> {
        Ok(Self {
            model: TinyLlamaModel::with_config(config)?,
            initialized: false,
        })
    }

    /// Initialize from a model directory containing `vocab.txt`,
    /// `merges.txt` and `weights.bin`.
    pub fn initialize<P: AsRef<Path>>(&mut self, model_path: P) -> Result<()> {
        let model_path = model_path.as_ref();
        validate_directory_path(model_path, "model_path")?;

        if self.initialized {
            return Err(TinyLlamaError::InvalidConfig(
                "model is already initialized; create a new instance to reinitialize".into(),
            ));
        }

        let vocab_file: PathBuf = model_path.join("vocab.txt");
        let merges_file: PathBuf = model_path.join("merges.txt");
        let weights_file: PathBuf = model_path.join("weights.bin");

        validate_file_path(&vocab_file, "vocab_file")?;
        validate_file_path(&merges_file, "merges_file")?;
        validate_file_path(&weights_file, "weights_file")?;

        self.initialize_with_config(vocab_file, merges_file, weights_file)
    }

    /// Initialize from explicit vocabulary, merges and weight file paths.
    pub fn initialize_with_config<P: AsRef<Path>>(
        &mut self,
        vocab_file: P,
        merges_file: P,
        weights_file: P,
    ) -> Result<()> {
        let vocab_file = vocab_file.as_ref();
        let merges_file = merges_file.as_ref();
        let weights_file = weights_file.as_ref();

        validate_file_path(vocab_file, "vocab_file")?;
        validate_file_path(merges_file, "merges_file")?;
        validate_file_path(weights_file, "weights_file")?;

        if self.initialized {
            return Err(TinyLlamaError::InvalidConfig(
                "model is already initialized; create a new instance to reinitialize".into(),
            ));
        }

        self.model.load_tokenizer(vocab_file, merges_file)?;
        self.model.load_weights(weights_file)?;
        self.initialized = true;

        log::info!("model initialized (vocab size {})", self.model.vocab_size());
        Ok(())
    }

    /// Generate text from a prompt. The result always begins with the
    /// prompt itself.
    pub fn generate(&self, prompt: &str, max_tokens: usize) -> Result<String> {
        if !self.initialized {
            return Err(TinyLlamaError::NotInitialized(
                "model not initialized; call initialize() first".into(),
            ));
        }
        validate_string_input(prompt, "prompt", false)?;
        if max_tokens == 0 {
            return Err(TinyLlamaError::InvalidConfig(
                "max_tokens must be at least 1".into(),
            ));
        }
        if max_tokens > MAX_GENERATION_TOKENS {
            return Err(TinyLlamaError::InvalidConfig(format!(
                "max_tokens is too large (max {}, got {})",
                MAX_GENERATION_TOKENS, max_tokens
            )));
        }
        let model_max = self.model.config().max_sequence_length;
        if max_tokens > model_max {
            return Err(TinyLlamaError::InvalidConfig(format!(
                "max_tokens exceeds the model's maximum sequence length ({}, got {})",
                model_max, max_tokens
            )));
        }

        // Temperature 0.0 resolves to the model's stored default.
        self.model.generate_text(prompt, max_tokens, 0.0)
    }

    pub fn tokenize_to_ids(&self, text: &str) -> Result<Vec<usize>> {
        if !self.initialized {
            return Err(TinyLlamaError::NotInitialized(
                "model not initialized; call initialize() first".into(),
            ));
        }
        validate_string_input(text, "text", true)?;
        self.model.tokenize(text)
    }

    pub fn tokenize_to_strings(&self, text: &str) -> Result<Vec<String>> {
        if !self.initialized {
            return Err(TinyLlamaError::NotInitialized(
                "model not initialized; call initialize() first".into(),
            ));
        }
        validate_string_input(text, "text", true)?;
        self.model.tokenize_to_strings(text)
    }

    pub fn detokenize(&self, token_ids: &[usize]) -> Result<String> {
        if !self.initialized {
            return Err(TinyLlamaError::NotInitialized(
                "model not initialized; call initialize() first".into(),
            ));
        }
        if token_ids.len() > MAX_TOKEN_COUNT {
            return Err(TinyLlamaError::InvalidConfig(format!(
                "token_ids contains too many tokens (max {}, got {})",
                MAX_TOKEN_COUNT,
                token_ids.len()
            )));
        }
        self.model.detokenize(token_ids)
    }

    pub fn set_temperature(&mut self, temperature: f32) -> Result<()> {
        if !temperature.is_finite() {
            return Err(TinyLlamaError::InvalidConfig(format!(
                "temperature must be a finite number (got {})",
                temperature
            )));
        }
        if !(MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&temperature) {
            return Err(TinyLlamaError::InvalidConfig(format!(
                "temperature must be between {} and {} (got {})",
                MIN_TEMPERATURE, MAX_TEMPERATURE, temperature
            )));
        }
        self.model.set_temperature(temperature);
        Ok(())
    }

    pub fn get_vocab_size(&self) -> Result<usize> {
        if !self.initialized {
            return Err(TinyLlamaError::NotInitialized(
                "model not initialized; call initialize() first".into(),
            ));
        }
        Ok(self.model.vocab_size())
    }

    pub fn is_ready(&self) -> bool {
        self.initialized
    }

    pub fn config(&self) -> &ModelConfig {
        self.model.config()
    }
}
