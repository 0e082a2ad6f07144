use anyhow::Result;
use nodeflow::prelude::*;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    Logger::init_tracing();

    println!("=== NodeFlow loop demo ===\n");

    let ctx = FlowContext::default();
    let logger = Logger::for_context(&ctx);

    let flow = nodeflow::flow::<i64, FlowContext>()
        .label("loop")
        .then(|v, ctx| {
            println!("first {v}");
            Ok(ctx.increment("passes"))
        })
        .check(|v, _| {
            println!("check {v}");
            Ok(if v > 20 { v } else { 0 })
        })
        .on_true(Step::callback(
            |v: i64, _: &FlowContext, done: Completion<i64>| {
                println!("yes {v}");
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    done.ok(33);
                });
            },
        ))
        .on_false(nodeflow::flow::<i64, FlowContext>().goto("loop"))
        .then(|v, _| {
            println!("end {v}");
            Ok(v)
        })
        .on_error(logger.error_handler::<FlowContext>())
        .always(|v: Option<&i64>, _: &FlowContext| println!("finally {v:?}"));

    let handle = flow.run_with_config(0, ctx.clone(), RunConfig::named("loop_demo"));
    println!("run scheduled, trace id {}", handle.trace_id());

    let result = handle.join().await?;
    println!("\nresult: {result:?}");
    println!("passes: {:?}", ctx.get_variable("passes"));

    logger.log_context_summary(&ctx);
    Ok(())
}
