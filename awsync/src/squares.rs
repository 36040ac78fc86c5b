//! The demo workload: the coordinator squares a list of numbers, `0..fanout` unless the event
//! names them, by fanning out one worker per number and sums the squares it collects from the
//! channel.

use awsync_core::{
    Arguments, Channel, ChannelProjection, Context, Error, Invoker, MailboxService, Registry,
    Result, TaskRef, gather,
};
use tracing::info;

pub(crate) const MODULE: &str = "awsync";

pub(crate) fn register<M, I>(registry: &mut Registry<M, I>, fanout: usize)
where
    M: MailboxService,
    I: Invoker,
{
    let square_task = registry.register_in(MODULE, "square", square);
    registry.register_in(
        MODULE,
        "main",
        move |ctx: Context<M, I>, args: Arguments| {
            let square_task = square_task.clone();
            async move {
                let numbers: Vec<i64> = match args.kwarg_opt("numbers")? {
                    Some(numbers) => numbers,
                    None => (0..fanout as i64).collect(),
                };
                sum_of_squares(ctx, square_task, numbers).await
            }
        },
    );
}

async fn sum_of_squares<M, I>(ctx: Context<M, I>, square: TaskRef, numbers: Vec<i64>) -> Result<i64>
where
    M: MailboxService,
    I: Invoker,
{
    ctx.with_channel(|channel| {
        let ctx = ctx.clone();
        async move {
            for n in &numbers {
                let task = square.call().arg(&channel)?.arg(n)?;
                ctx.dispatch(&task).await?;
            }
            info!(workers = numbers.len(), url = channel.address(), "Waiting for squares");

            let squares: Vec<i64> = gather(&channel, numbers.len()).await?;
            Ok(squares.into_iter().sum::<i64>())
        }
    })
    .await
}

async fn square<M, I>(ctx: Context<M, I>, args: Arguments) -> Result<()>
where
    M: MailboxService,
    I: Invoker,
{
    let channel = ctx.channel(args.arg::<ChannelProjection>(0)?);
    let n: i64 = args.arg(1)?;
    let squared = n
        .checked_mul(n)
        .ok_or_else(|| Error::task(format!("{n} squared overflows")))?;
    channel.push(&squared).await
}
