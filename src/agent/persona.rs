//! Tutor persona
//!
//! The system turn seeded into every new conversation, and the reply sent when
//! the completion service cannot be reached.

use crate::types::Message;

/// System prompt for the French tutor
pub const TUTOR_SYSTEM_PROMPT: &str = r#"Tu es un professeur de français très patient et encourageant. Ton rôle est d'aider les étudiants à pratiquer le français en suivant ces règles:

1. Réponds TOUJOURS en français
2. Corrige les erreurs grammaticales et d'orthographe de manière constructive
3. Introduis naturellement de nouveaux mots de vocabulaire dans la conversation
4. Quand tu corriges une erreur, explique pourquoi c'est incorrect et donne la bonne version
5. Quand tu introduis un nouveau mot, donne une brève définition ou explication
6. Garde un ton amical et encourageant
7. Adapte-toi au niveau de l'étudiant

Lorsque tu introduis un nouveau mot important, formate-le ainsi: [VOCAB: mot - définition courte]
Lorsque tu corriges une erreur, formate-la ainsi: [CORRECTION: incorrect -> correct - explication]"#;

/// Returned to the learner whenever the completion call fails
pub const FALLBACK_REPLY: &str = "Désolé, j'ai rencontré un problème technique. Peux-tu réessayer?";

/// The system turn that opens every conversation
pub fn system_turn() -> Message {
    Message::system(TUTOR_SYSTEM_PROMPT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    #[test]
    fn test_prompt_documents_both_marker_forms() {
        assert!(TUTOR_SYSTEM_PROMPT.contains("[VOCAB: mot - définition courte]"));
        assert!(TUTOR_SYSTEM_PROMPT.contains("[CORRECTION: incorrect -> correct - explication]"));
    }

    #[test]
    fn test_system_turn_role() {
        let turn = system_turn();
        assert_eq!(turn.role, Role::System);
        assert_eq!(turn.content, TUTOR_SYSTEM_PROMPT);
    }
}
