use anyhow::{Context, Result};

use tinyllama::TinyLlama;

use crate::args::InfoArgs;

pub fn execute(args: &InfoArgs) -> Result<()> {
    let mut llama = TinyLlama::new()?;
    llama
        .initialize(&args.model_dir)
        .with_context(|| format!("failed to initialize model from {}", args.model_dir))?;

    let config = llama.config();
    println!("--- Model Info ---");
    println!("  Model dim   : {}", config.model_dim);
    println!("  Layers      : {}", config.num_layers);
    println!("  Heads       : {}", config.num_heads);
    println!("  FFN hidden  : {}", config.ffn_hidden_dim);
    println!("  Max seq len : {}", config.max_sequence_length);
    println!("  Vocab size  : {}", llama.get_vocab_size()?);
    Ok(())
}
