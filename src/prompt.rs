//! Fixed answering template.

/// Answer returned when the store has nothing relevant; the model is not called.
pub const NO_CONTEXT_ANSWER: &str = "No relevant context was found in the document store.";

/// Low temperature keeps answers close to the supplied context.
pub const ANSWER_TEMPERATURE: f32 = 0.2;

/// Builds the prompt: instruction, assembled context, then the literal question.
pub fn build_prompt(question: &str, context: &str) -> String {
    let mut prompt = String::with_capacity(context.len() + question.len() + 256);
    prompt.push_str(
        "You are a document assistant. Answer strictly from the context below and cite chunk ids in brackets.\n\n",
    );
    prompt.push_str("Context:\n");
    prompt.push_str(context);
    prompt.push_str("\n\nQuestion: ");
    prompt.push_str(question);
    prompt.push_str(
        "\n\nIf the context does not contain enough information, say so honestly instead of guessing.",
    );
    prompt
}
