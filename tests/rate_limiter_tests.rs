//! Rate limiter accounting tests

use docql_limit::{Error, RateLimiter};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn test_limit_exhaustion_reports_retry_guidance() {
    let limiter = RateLimiter::new(2, Duration::from_secs(60));
    limiter.check("agent").expect("first call");
    limiter.check("agent").expect("second call");

    let err = limiter.check("agent").unwrap_err();
    match err {
        Error::RateLimitExceeded {
            limit,
            window,
            retry_after,
        } => {
            assert_eq!(limit, 2);
            assert_eq!(window, 60.0);
            assert!(retry_after > 0.0);
            assert!(retry_after <= 60.0);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_reset_restores_capacity() {
    let limiter = RateLimiter::new(2, Duration::from_secs(60));
    limiter.check("agent").expect("call");
    limiter.check("agent").expect("call");
    assert_eq!(limiter.remaining("agent"), 0);
    assert!(!limiter.available("agent"));

    limiter.reset();
    assert_eq!(limiter.remaining("agent"), limiter.limit());
    assert!(limiter.available("agent"));
}

#[test]
fn test_stats_do_not_consume() {
    let limiter = RateLimiter::new(3, Duration::from_secs(30));
    limiter.check("agent").expect("call");

    for _ in 0..5 {
        let stats = limiter.stats("agent");
        assert_eq!(stats.limit, 3);
        assert_eq!(stats.window, 30.0);
        assert_eq!(stats.used, 1);
        assert_eq!(stats.remaining, 2);
        assert_eq!(stats.retry_after, 0.0);
    }

    limiter.check("agent").expect("call");
    limiter.check("agent").expect("call");
    let stats = limiter.stats("agent");
    assert_eq!(stats.remaining, 0);
    assert!(stats.retry_after > 0.0);
}

#[test]
fn test_concurrent_checks_never_overshoot() {
    let limiter = Arc::new(RateLimiter::new(100, Duration::from_secs(60)));
    let ok = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let limiter = Arc::clone(&limiter);
            let ok = Arc::clone(&ok);
            thread::spawn(move || {
                for _ in 0..10 {
                    if limiter.check("shared").is_ok() {
                        ok.fetch_add(1, Ordering::SeqCst);
                    }
                }
            })
        })
        .collect();
    for h in handles {
        h.join().expect("worker panicked");
    }

    assert_eq!(ok.load(Ordering::SeqCst), 100);
    assert_eq!(limiter.remaining("shared"), 0);
    assert!(limiter.check("shared").is_err());
}

#[test]
fn test_oversubscribed_concurrent_checks() {
    let limiter = Arc::new(RateLimiter::new(50, Duration::from_secs(60)));
    let ok = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let limiter = Arc::clone(&limiter);
            let ok = Arc::clone(&ok);
            thread::spawn(move || {
                for _ in 0..20 {
                    if limiter.check("shared").is_ok() {
                        ok.fetch_add(1, Ordering::SeqCst);
                    }
                }
            })
        })
        .collect();
    for h in handles {
        h.join().expect("worker panicked");
    }

    assert_eq!(ok.load(Ordering::SeqCst), 50);
    assert_eq!(limiter.stats("shared").used, 50);
}

#[test]
fn test_reset_single_caller() {
    let limiter = RateLimiter::new(1, Duration::from_secs(60));
    limiter.check("a").expect("a");
    limiter.check("b").expect("b");
    limiter.reset_caller("a");
    assert!(limiter.available("a"));
    assert!(!limiter.available("b"));
}

#[test]
fn test_stats_serialize() {
    let limiter = RateLimiter::new(5, Duration::from_secs(60));
    limiter.check("agent").expect("call");
    let value = serde_json::to_value(limiter.stats("agent")).expect("serialize");
    assert_eq!(value["limit"], 5);
    assert_eq!(value["window"], 60.0);
    assert_eq!(value["used"], 1);
    assert_eq!(value["remaining"], 4);
}
