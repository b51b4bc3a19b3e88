use genesis_llm::Message;
use std::collections::HashMap;

/// Merge `incoming` into `existing` by message identity
///
/// A message whose `id` is already present replaces the stored one in place;
/// any other message is appended in arrival order. Merging the same message
/// twice leaves exactly one copy at its original position.
pub fn merge_messages(existing: Vec<Message>, incoming: Vec<Message>) -> Vec<Message> {
    let mut merged = existing;
    let mut index: HashMap<String, usize> = merged
        .iter()
        .enumerate()
        .map(|(i, m)| (m.id.clone(), i))
        .collect();

    for message in incoming {
        match index.get(&message.id) {
            Some(&pos) => merged[pos] = message,
            None => {
                index.insert(message.id.clone(), merged.len());
                merged.push(message);
            }
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_preserves_order() {
        let a = Message::user("a");
        let b = Message::assistant("b");
        let merged = merge_messages(vec![a.clone()], vec![b.clone()]);
        assert_eq!(merged, vec![a, b]);
    }

    #[test]
    fn test_same_identity_is_idempotent() {
        let a = Message::user("a");
        let b = Message::assistant("b");
        let c = Message::user("c");

        let once = merge_messages(vec![a.clone(), b.clone()], vec![c.clone()]);
        let twice = merge_messages(once.clone(), vec![a.clone()]);
        assert_eq!(twice, once);
        assert_eq!(twice.iter().filter(|m| m.id == a.id).count(), 1);
        assert_eq!(twice[0].id, a.id);
    }

    #[test]
    fn test_replace_in_place() {
        let a = Message::user("a");
        let b = Message::assistant("draft");
        let revised = Message::assistant("final").with_id(b.id.clone());

        let merged = merge_messages(vec![a.clone(), b], vec![revised.clone()]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[1].content, "final");
        assert_eq!(merged[0], a);
    }

    #[test]
    fn test_duplicates_within_incoming() {
        let a = Message::user("a");
        let merged = merge_messages(Vec::new(), vec![a.clone(), a.clone()]);
        assert_eq!(merged, vec![a]);
    }
}
