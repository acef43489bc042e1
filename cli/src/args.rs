use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tinyllama", about = "tinyllama — minimal transformer LM inference")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate text from a prompt
    Generate(GenerateArgs),
    /// Tokenize text and print the tokens or ids
    Tokenize(TokenizeArgs),
    /// Print model information
    Info(InfoArgs),
}

#[derive(Parser)]
pub struct GenerateArgs {
    /// Directory containing vocab.txt, merges.txt and weights.bin
    #[arg(long)]
    pub model_dir: String,

    /// Input text prompt
    #[arg(long)]
    pub prompt: String,

    /// Maximum number of tokens to generate
    #[arg(long, default_value = "50")]
    pub max_tokens: usize,

    /// Sampling temperature (softmax scaling; selection is greedy)
    #[arg(long)]
    pub temperature: Option<f32>,
}

#[derive(Parser)]
pub struct TokenizeArgs {
    /// Directory containing vocab.txt, merges.txt and weights.bin
    #[arg(long)]
    pub model_dir: String,

    /// Text to tokenize
    #[arg(long)]
    pub text: String,

    /// Print token ids instead of token strings
    #[arg(long)]
    pub ids: bool,
}

#[derive(Parser)]
pub struct InfoArgs {
    /// Directory containing vocab.txt, merges.txt and weights.bin
    #[arg(long)]
    pub model_dir: String,
}
