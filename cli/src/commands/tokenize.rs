use anyhow::{Context, Result};

use tinyllama::TinyLlama;

use crate::args::TokenizeArgs;

pub fn execute(args: &TokenizeArgs) -> Result<()> {
    let mut llama = TinyLlama::new()?;
    llama
        .initialize(&args.model_dir)
        .with_context(|| format!("failed to initialize model from {}", args.model_dir))?;

    if args.ids {
        let ids = llama.tokenize_to_ids(&args.text)?;
        let rendered: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
        println!("{}", rendered.join(" "));
    } else {
        let tokens = llama.tokenize_to_strings(&args.text)?;
        for token in &tokens {
            println!("{:?}", token);
        }
        eprintln!("{} tokens", tokens.len());
    }
    Ok(())
}
