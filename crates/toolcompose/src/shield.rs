//! Shield classifier (§4.H): partitions the upstream's shield list into
//! input and output lists by identifier prefix.

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShieldClassification {
    pub input_shields: Vec<String>,
    pub output_shields: Vec<String>,
}

/// `inout_*` goes to both lists, `output_*` to the output list, anything
/// else to the input list. Logs (does not fail) when both end up empty.
pub fn classify_shields(identifiers: &[String]) -> ShieldClassification {
    let mut classification = ShieldClassification::default();
    for id in identifiers {
        if let Some(stripped) = id.strip_prefix("inout_") {
            let _ = stripped;
            classification.input_shields.push(id.clone());
            classification.output_shields.push(id.clone());
        } else if id.starts_with("output_") {
            classification.output_shields.push(id.clone());
        } else {
            classification.input_shields.push(id.clone());
        }
    }

    if classification.input_shields.is_empty() && classification.output_shields.is_empty() {
        tracing::info!("safety disabled: no shields configured upstream");
    }

    classification
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inout_prefix_goes_to_both_lists() {
        let result = classify_shields(&["inout_pii".to_string()]);
        assert_eq!(result.input_shields, vec!["inout_pii"]);
        assert_eq!(result.output_shields, vec!["inout_pii"]);
    }

    #[test]
    fn output_prefix_goes_to_output_only() {
        let result = classify_shields(&["output_toxicity".to_string()]);
        assert!(result.input_shields.is_empty());
        assert_eq!(result.output_shields, vec!["output_toxicity"]);
    }

    #[test]
    fn other_prefix_goes_to_input_only() {
        let result = classify_shields(&["prompt_injection".to_string()]);
        assert_eq!(result.input_shields, vec!["prompt_injection"]);
        assert!(result.output_shields.is_empty());
    }

    #[test]
    fn empty_list_proceeds_without_error() {
        let result = classify_shields(&[]);
        assert!(result.input_shields.is_empty());
        assert!(result.output_shields.is_empty());
    }

    #[test]
    fn mixed_list_partitions_correctly() {
        let ids = vec![
            "inout_pii".to_string(),
            "output_toxicity".to_string(),
            "prompt_injection".to_string(),
        ];
        let result = classify_shields(&ids);
        assert_eq!(result.input_shields, vec!["inout_pii", "prompt_injection"]);
        assert_eq!(result.output_shields, vec!["inout_pii", "output_toxicity"]);
    }
}
