//! Prompt rendering: product listings, conversation history, and the system prompt.

use std::fmt::Write;

use edusmart_core::locale::{
    no_matches_message, product_labels, response_instruction, store_policy,
};
use edusmart_core::{ConversationTurn, Language, ProductRecord};

/// Numbered product listing under a localized heading.
pub fn product_context(products: &[ProductRecord], language: Language) -> String {
    if products.is_empty() {
        return no_matches_message(language).to_string();
    }

    let l = product_labels(language);
    let mut out = format!("{}\n", l.heading);

    for (i, p) in products.iter().enumerate() {
        let _ = write!(
            out,
            "{n}. {name} ({brand})\n   {} {desc}\n   {} {features}\n   {} {category} | {} {age}\n   {} ${price:.2} | {} {stock} {}\n   \n",
            l.description,
            l.features,
            l.category,
            l.age,
            l.price,
            l.stock,
            l.units,
            n = i + 1,
            name = p.name,
            brand = p.brand,
            desc = p.description,
            features = p.features,
            category = p.category,
            age = p.age_range,
            price = p.price,
            stock = p.stock,
        );
    }

    out
}

/// Chronological `User:` / `Assistant:` lines from newest-first history.
pub fn conversation_context(history_newest_first: &[ConversationTurn]) -> String {
    history_newest_first
        .iter()
        .rev()
        .fold(String::new(), |mut out, turn| {
            let _ = write!(
                out,
                "User: {}\nAssistant: {}\n",
                turn.user_message, turn.assistant_response
            );
            out
        })
}

pub fn system_prompt(language: Language, product_context: &str, conversation_context: &str) -> String {
    format!(
        "{}\n\n{}\n\n{}\n\n{}",
        store_policy(language),
        product_context,
        conversation_context,
        response_instruction(language)
    )
}
