use anyhow::{Context, Result};

use tinyllama::TinyLlama;

use crate::args::GenerateArgs;

pub fn execute(args: &GenerateArgs) -> Result<()> {
    let mut llama = TinyLlama::new()?;
    llama
        .initialize(&args.model_dir)
        .with_context(|| format!("failed to initialize model from {}", args.model_dir))?;

    if let Some(temperature) = args.temperature {
        llama.set_temperature(temperature)?;
    }

    eprintln!("Vocab size: {}", llama.get_vocab_size()?);
    eprintln!("Generating up to {} tokens...", args.max_tokens);

    let output = llama
        .generate(&args.prompt, args.max_tokens)
        .context("text generation failed")?;

    println!("{}", output);
    Ok(())
}
