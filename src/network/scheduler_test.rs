use tokio::sync::mpsc;
use tokio::sync::watch;

use super::scheduler::run_scheduler;
use crate::IrcCommand;
use crate::MembershipOp;

#[tokio::test]
async fn commands_should_be_formatted_as_wire_lines() {
    let (_shutdown_tx, shutdown_rx) = watch::channel(());
    let (commands_tx, commands_rx) = mpsc::channel(8);
    let (writer_tx, mut writer_rx) = mpsc::channel(8);

    let task = tokio::spawn(run_scheduler(shutdown_rx, commands_rx, writer_tx));

    commands_tx
        .send(IrcCommand {
            op: MembershipOp::Join,
            channel: "#chess".to_string(),
        })
        .await
        .unwrap();
    commands_tx
        .send(IrcCommand {
            op: MembershipOp::Part,
            channel: "#go".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(writer_rx.recv().await.unwrap(), "JOIN #chess\r\n");
    assert_eq!(writer_rx.recv().await.unwrap(), "PART #go\r\n");

    drop(commands_tx);
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn shutdown_should_stop_the_scheduler() {
    let (shutdown_tx, shutdown_rx) = watch::channel(());
    let (_commands_tx, commands_rx) = mpsc::channel::<IrcCommand>(8);
    let (writer_tx, _writer_rx) = mpsc::channel(8);

    let task = tokio::spawn(run_scheduler(shutdown_rx, commands_rx, writer_tx));
    shutdown_tx.send(()).unwrap();
    task.await.unwrap().unwrap();
}
