//! Persona and prompt assembly shared by every generative backend

use crate::fallback::DataSummary;

pub const ASSISTANT_PERSONA: &str = r#"Você é um assistente inteligente que ajuda funcionários com análise de dados e informações da operação.

Seja sempre:
- Direto e objetivo
- Profissional mas amigável
- Use emojis quando apropriado
- Formate respostas longas com bullet points
- Responda em português brasileiro
- Às vezes seja um pouco sarcástico
"#;

/// Token budget for a plain question.
pub const MAX_TOKENS_PLAIN: u32 = 500;
/// Token budget when data context is attached.
pub const MAX_TOKENS_WITH_DATA: u32 = 800;

pub const TEMPERATURE: f32 = 0.7;

/// Context block describing the data the question can be answered from.
pub fn format_data_context(summary: &DataSummary) -> String {
    format!(
        "Dados disponíveis:\n{}\n\nAmostra dos dados:\n{}\n",
        summary.overview(),
        summary.sample
    )
}

/// Full single-message prompt: persona, optional context, then the question.
pub fn build_prompt(question: &str, context: Option<&DataSummary>) -> String {
    let mut prompt = String::from(ASSISTANT_PERSONA);

    if let Some(summary) = context {
        prompt.push_str(&format!("\nContexto disponível:\n{}\n", format_data_context(summary)));
    }

    prompt.push_str(&format!("\nPergunta do usuário: {}\n\nResposta:", question));
    prompt
}

/// User-turn text when the persona travels separately as a system prompt.
pub fn build_user_message(question: &str, context: Option<&DataSummary>) -> String {
    match context {
        Some(summary) => format!(
            "Contexto disponível:\n{}\nPergunta do usuário: {}",
            format_data_context(summary),
            question
        ),
        None => format!("Pergunta do usuário: {}", question),
    }
}

pub fn max_tokens_for(context: Option<&DataSummary>) -> u32 {
    if context.is_some() {
        MAX_TOKENS_WITH_DATA
    } else {
        MAX_TOKENS_PLAIN
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> DataSummary {
        DataSummary {
            columns: vec!["Produto".to_string(), "Qtd".to_string()],
            row_count: 2,
            sample: "Produto  Qtd\nCaneta   10 ".to_string(),
        }
    }

    #[test]
    fn test_build_prompt_without_context() {
        let prompt = build_prompt("quem sou eu?", None);
        assert!(prompt.starts_with(ASSISTANT_PERSONA));
        assert!(!prompt.contains("Contexto disponível"));
        assert!(prompt.ends_with("Pergunta do usuário: quem sou eu?\n\nResposta:"));
    }

    #[test]
    fn test_build_prompt_with_context() {
        let prompt = build_prompt("por que caiu?", Some(&summary()));
        assert!(prompt.contains("Colunas: Produto, Qtd\nRegistros: 2"));
        assert!(prompt.contains("Amostra dos dados:\nProduto  Qtd"));
    }

    #[test]
    fn test_max_tokens() {
        assert_eq!(max_tokens_for(None), 500);
        assert_eq!(max_tokens_for(Some(&summary())), 800);
    }

    #[test]
    fn test_build_user_message() {
        assert_eq!(build_user_message("oi", None), "Pergunta do usuário: oi");
        assert!(build_user_message("oi", Some(&summary())).contains("Registros: 2"));
    }
}
