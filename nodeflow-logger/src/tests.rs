#[cfg(test)]
mod tests {
    use crate::Logger;
    use nodeflow_context::FlowContext;
    use nodeflow_core::Flow;

    #[test]
    fn test_logger_trace_ids() {
        let ctx = FlowContext::new_with_trace_id("abc".to_string());
        assert_eq!(Logger::for_context(&ctx).trace_id, "abc");
        assert_ne!(Logger::new().trace_id, Logger::new().trace_id);
    }

    #[tokio::test]
    async fn test_handlers_attach_to_flow() {
        Logger::init_tracing();
        let logger = Logger::with_trace_id("run-1".to_string());

        let flow = Flow::<i64, FlowContext>::new()
            .then(|v, ctx| {
                ctx.set_variable("seen", v.to_string());
                Ok(v)
            })
            .goto("nowhere")
            .on_error(logger.error_handler::<FlowContext>())
            .always(logger.cleanup_handler::<i64, FlowContext>());

        let ctx = FlowContext::default();
        let result = flow.run(3, ctx.clone()).join().await.unwrap();

        assert_eq!(result, None);
        assert_eq!(ctx.get_variable("seen"), Some("3".to_string()));
        logger.log_context_summary(&ctx);
    }
}
