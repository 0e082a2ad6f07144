#[cfg(test)]
mod tests {
    use crate::FlowContext;

    #[test]
    fn test_clones_share_variables() {
        let ctx = FlowContext::default();
        let other = ctx.clone();

        other.set_variable("mode", "production");

        assert_eq!(ctx.get_variable("mode"), Some("production".to_string()));
        assert_eq!(ctx.trace_id, other.trace_id);
    }

    #[test]
    fn test_increment() {
        let ctx = FlowContext::new_with_trace_id("t-1".to_string());
        assert_eq!(ctx.increment("count"), 1);
        assert_eq!(ctx.increment("count"), 2);

        ctx.set_variable("count", "not a number");
        assert_eq!(ctx.increment("count"), 1);
    }

    #[test]
    fn test_remove_variable() {
        let ctx = FlowContext::default();
        ctx.set_variable("k", "v");
        assert_eq!(ctx.remove_variable("k"), Some("v".to_string()));
        assert!(ctx.variables().is_empty());
    }

    #[test]
    fn test_snapshot_rollback() {
        let ctx = FlowContext::default();
        ctx.set_variable("stage", "one");
        ctx.create_snapshot("before").unwrap();
        assert!(ctx.create_snapshot("before").is_err());

        ctx.set_variable("stage", "two");
        ctx.set_variable("extra", "x");
        ctx.rollback_to_snapshot("before").unwrap();

        assert_eq!(ctx.get_variable("stage"), Some("one".to_string()));
        assert_eq!(ctx.get_variable("extra"), None);

        ctx.remove_snapshot("before").unwrap();
        assert!(ctx.rollback_to_snapshot("before").is_err());
    }

    #[tokio::test]
    async fn test_shared_across_tasks() {
        let ctx = FlowContext::default();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ctx = ctx.clone();
                tokio::spawn(async move {
                    ctx.increment("hits");
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(ctx.get_variable("hits"), Some("4".to_string()));
    }
}
