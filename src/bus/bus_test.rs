#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::StreamExt;
    use tokio::time::timeout;

    use crate::bus::Bus;
    use crate::error::BusError;
    use crate::model::{DeploymentId, Event};

    fn created(dseq: u64) -> Event {
        Event::DeploymentCreated {
            id: DeploymentId::new("akash1owner", dseq),
        }
    }

    #[tokio::test]
    async fn test_every_subscriber_sees_every_event_in_order() {
        let bus = Bus::new(64);
        let mut subs: Vec<_> = (0..4).map(|_| bus.subscribe().unwrap()).collect();

        for dseq in 0..50 {
            assert_eq!(bus.publish(created(dseq)).await.unwrap(), 4);
        }

        for sub in subs.iter_mut() {
            for dseq in 0..50 {
                assert_eq!(sub.recv().await, Some(created(dseq)));
            }
        }
    }

    #[tokio::test]
    async fn test_close_unblocks_waiting_subscribers() {
        let bus = Bus::new(8);
        let mut handles = Vec::new();
        for _ in 0..3 {
            let mut sub = bus.subscribe().unwrap();
            handles.push(tokio::spawn(async move { sub.recv().await }));
        }
        tokio::task::yield_now().await;

        bus.close();

        for handle in handles {
            let got = timeout(Duration::from_secs(1), handle)
                .await
                .expect("subscriber stayed blocked")
                .unwrap();
            assert_eq!(got, None);
        }
    }

    #[tokio::test]
    async fn test_close_keeps_already_delivered_events() {
        let bus = Bus::new(8);
        let mut sub = bus.subscribe().unwrap();

        bus.publish(created(1)).await.unwrap();
        bus.publish(created(2)).await.unwrap();
        bus.close();

        assert!(sub.is_closed());
        assert_eq!(sub.recv().await, Some(created(1)));
        assert_eq!(sub.recv().await, Some(created(2)));
        assert_eq!(sub.recv().await, None);
    }

    #[tokio::test]
    async fn test_publish_after_close_fails() {
        let bus = Bus::new(8);
        bus.close();
        assert_eq!(bus.publish(created(1)).await, Err(BusError::Closed));
        assert!(bus.subscribe().is_err());
    }

    #[tokio::test]
    async fn test_full_subscriber_blocks_publisher_until_drained() {
        let bus = Bus::new(1);
        let mut sub = bus.subscribe().unwrap();

        bus.publish(created(1)).await.unwrap();

        let publisher = bus.clone();
        let pending = tokio::spawn(async move { publisher.publish(created(2)).await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!pending.is_finished());

        assert_eq!(sub.recv().await, Some(created(1)));
        assert_eq!(pending.await.unwrap(), Ok(1));
        assert_eq!(sub.recv().await, Some(created(2)));
    }

    #[tokio::test]
    async fn test_close_releases_a_blocked_publisher() {
        let bus = Bus::new(1);
        let _sub = bus.subscribe().unwrap();
        bus.publish(created(1)).await.unwrap();

        let publisher = bus.clone();
        let pending = tokio::spawn(async move { publisher.publish(created(2)).await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        bus.close();
        let res = timeout(Duration::from_secs(1), pending).await.unwrap().unwrap();
        assert_eq!(res, Err(BusError::Closed));
    }

    #[tokio::test]
    async fn test_dropped_subscribers_are_pruned() {
        let bus = Bus::new(4);
        let keep = bus.subscribe().unwrap();
        let gone = bus.subscribe().unwrap();
        assert_eq!(bus.subscribers(), 2);

        drop(gone);
        assert_eq!(bus.subscribers(), 1);
        assert_eq!(bus.publish(created(1)).await.unwrap(), 1);
        drop(keep);
    }

    #[tokio::test]
    async fn test_closing_one_subscription_leaves_the_others() {
        let bus = Bus::new(4);
        let mut a = bus.subscribe().unwrap();
        let mut b = bus.subscribe().unwrap();

        bus.publish(created(1)).await.unwrap();
        a.close();
        bus.publish(created(2)).await.unwrap();

        assert_eq!(a.recv().await, Some(created(1)));
        assert_eq!(a.recv().await, None);
        assert_eq!(b.recv().await, Some(created(1)));
        assert_eq!(b.recv().await, Some(created(2)));
    }

    #[tokio::test]
    async fn test_stream_adapter_ends_with_the_bus() {
        let bus = Bus::new(4);
        let stream = bus.subscribe().unwrap().into_stream();

        bus.publish(created(1)).await.unwrap();
        bus.publish(created(2)).await.unwrap();
        bus.close();

        let got: Vec<Event> = stream.collect().await;
        assert_eq!(got, vec![created(1), created(2)]);
    }
}
