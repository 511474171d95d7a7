pub mod a2a;
pub mod gemini;
pub mod perplexity;
