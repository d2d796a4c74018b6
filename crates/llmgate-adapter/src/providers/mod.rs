mod gemini;
mod openai;
mod zhipu;

pub use gemini::GeminiAdapter;
pub use openai::OpenAiAdapter;
pub use zhipu::ZhipuAdapter;
