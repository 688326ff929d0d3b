mod scan_case {
    use std::sync::Arc;

    use bucket_index::{
        store::{connection::Connection, memory::MemoryBackend},
        IndexConfig, IndexManager,
    };
    use tokio::runtime::Builder;
    use vendor::prelude::*;

    pub fn run() {
        init_logger_factory(LogFactory::crate_scoped(slog::Level::Debug));

        let rt = Builder::new_current_thread().enable_all().build().unwrap();
        rt.block_on(async move {
            let conn = Connection::lazy(|| async {
                Ok::<_, std::io::Error>(MemoryBackend::standalone())
            });
            let index = IndexManager::from_connection(&conn, IndexConfig::default())
                .await
                .unwrap();
            info!("index opened"; "partitions" => index.partitions().len());

            for i in 0..500 {
                index
                    .add(&format!("user_{i:04}"), format!("user #{i}"))
                    .await
                    .unwrap();
                index
                    .add(&format!("order:{i:04}"), format!("order #{i}"))
                    .await
                    .unwrap();
            }

            let users = index.scan("user_0100", Some("user_0110"), 5).await.unwrap();
            for record in users.iter() {
                println!("{} => {}", record.key, String::from_utf8_lossy(&record.value));
            }
            println!("orders: {}", *index.count("order:", None).await.unwrap());

            let removed = index
                .del((0..250).map(|i| format!("order:{i:04}")).collect::<Vec<_>>())
                .await
                .unwrap();
            let left = index.count("order:", None).await.unwrap();
            println!("removed {removed}, orders left: {}", *left);

            let stats = index.stats(false).await.unwrap();
            println!(
                "records: {}, max/avg: {:.2}, skewed: {}",
                stats.total_records,
                stats.skew_ratio(),
                stats.is_skewed()
            );

            // a partition that stops answering only makes results partial
            let store: Arc<MemoryBackend> = conn.get().await.unwrap();
            store.fail_partition(&index.partition_of("user_0001").name);
            let users = index.count("user_", None).await.unwrap();
            println!("users: {} (partial: {})", users.value, users.is_partial());
        });
    }
}

fn main() {
    scan_case::run();
}
