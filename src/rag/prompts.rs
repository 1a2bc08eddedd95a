//! Prompt templates

/// Reply expected when the context cannot answer the question
pub const NO_ANSWER: &str = "I don't know based on the provided sources";

/// Stands in for the context when retrieval found nothing
pub const EMPTY_CONTEXT_MARKER: &str = "[No sources matched this question.]";

pub fn answer_prompt(context: &str, question: &str, context_is_empty: bool) -> String {
    let mut rules = vec![
        "Only answer based on the information provided in the context below".to_string(),
        format!(
            "If the context doesn't contain information to answer the question, respond with \"{}\"",
            NO_ANSWER
        ),
        "Be concise but comprehensive in your answers".to_string(),
        "When possible, cite the source numbers the information comes from".to_string(),
        "Do not make up or infer information not present in the context".to_string(),
    ];
    if context_is_empty {
        rules.push(format!(
            "The context is empty, so respond exactly with \"{}\"",
            NO_ANSWER
        ));
    }

    let rules = rules
        .iter()
        .enumerate()
        .map(|(i, rule)| format!("{}. {}", i + 1, rule))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are a helpful AI assistant that answers questions based strictly on the provided context.\n\n\
         Rules:\n{}\n\n\
         Context:\n{}\n\n\
         Question: {}\n\n\
         Answer:",
        rules, context, question
    )
}

pub fn summary_prompt(context: &str) -> String {
    format!(
        "You are a helpful AI assistant. Please provide a comprehensive summary of the following sources.\n\n\
         Instructions:\n\
         1. Identify the main topics and themes across all sources\n\
         2. Highlight key insights and important information\n\
         3. Organize the summary in a clear, structured way\n\
         4. Mention the types of sources and their scope\n\n\
         Sources:\n{}\n\n\
         Please provide a comprehensive summary:",
        context
    )
}
