pub mod output;
pub mod runner;
pub mod session;

pub use output::{extract_json_from_llm_output, final_answer, FinalPayload};
pub use runner::{AgentEvent, AgentSettings, DeepSearchAgent, InvokeRequest};
pub use session::{SessionKey, SessionStore};
