mod common;

use common::{controller, day, monday, FakeBroker, ScriptedClock, SubmittedOrder};
use rust_decimal_macros::dec;
use volatility_breakout_trader::schedule::LiquidationWindow;
use volatility_breakout_trader::{DayPhase, OrderSide, StopReason, Tick};

#[tokio::test]
async fn no_trading_before_open_or_after_exit() {
    let broker = FakeBroker::new(dec!(1000000))
        .quote("A", dec!(70000), dec!(60000))
        .holding("B", 3);
    let mut ctl = controller(broker, &["A"], 3);
    ctl.start().await.unwrap();
    let calls_after_start = ctl.broker().calls().len();

    for (h, m, s) in [(0, 0, 0), (7, 30, 0), (8, 59, 59)] {
        assert_eq!(ctl.tick(monday(h, m, s)).await.unwrap(), Tick::Continue(DayPhase::PreOpen));
    }
    assert_eq!(ctl.tick(monday(15, 20, 0)).await.unwrap(), Tick::Stop(StopReason::MarketClosed));
    assert_eq!(ctl.tick(monday(18, 0, 0)).await.unwrap(), Tick::Stop(StopReason::MarketClosed));

    assert_eq!(ctl.broker().calls().len(), calls_after_start);
    assert!(ctl.broker().orders().is_empty());
    assert!(ctl.notifier().contains("shutting down"));
}

#[tokio::test]
async fn weekend_stops_immediately() {
    let broker = FakeBroker::new(dec!(1000000)).quote("A", dec!(70000), dec!(60000));
    let mut ctl = controller(broker, &["A"], 3);
    ctl.start().await.unwrap();

    // Saturday, in the middle of what would be the buy window
    assert_eq!(ctl.tick(day(23, 10, 0, 0)).await.unwrap(), Tick::Stop(StopReason::Weekend));
    assert!(ctl.broker().orders().is_empty());
    assert!(ctl.notifier().contains("Weekend"));
}

#[tokio::test]
async fn breakout_buys_floor_of_allocation_over_price() {
    let broker = FakeBroker::new(dec!(1000000)).quote("005930", dec!(70000), dec!(69000));
    let mut ctl = controller(broker, &["005930"], 3);
    ctl.start().await.unwrap();
    assert_eq!(ctl.buy_amount(), dec!(330000.00));

    ctl.tick(monday(9, 30, 0)).await.unwrap();

    assert_eq!(
        ctl.broker().orders(),
        vec![SubmittedOrder { code: "005930".into(), quantity: 4, side: OrderSide::Buy }]
    );
    assert!(ctl.bought().contains("005930"));
    assert_eq!(ctl.ledger().quantity("005930"), 4);
    assert!(ctl.notifier().contains("[BUY OK]"));
}

#[tokio::test]
async fn price_at_target_is_not_a_breakout() {
    let broker = FakeBroker::new(dec!(1000000)).quote("A", dec!(70000), dec!(70000));
    let mut ctl = controller(broker, &["A"], 3);
    ctl.start().await.unwrap();
    ctl.tick(monday(10, 0, 0)).await.unwrap();
    assert!(ctl.broker().orders().is_empty());
    assert!(ctl.bought().is_empty());
}

#[tokio::test]
async fn zero_quantity_never_reaches_the_broker() {
    // allocation 330,000 cannot buy a single 400,000 share
    let broker = FakeBroker::new(dec!(1000000)).quote("A", dec!(400000), dec!(300000));
    let mut ctl = controller(broker, &["A"], 3);
    ctl.start().await.unwrap();

    assert!(!ctl.evaluate("A").await.unwrap());
    ctl.tick(monday(10, 0, 0)).await.unwrap();

    assert!(ctl.broker().orders().is_empty());
    assert!(ctl.bought().is_empty());
}

#[tokio::test]
async fn first_breakout_fills_the_only_slot() {
    let broker = FakeBroker::new(dec!(1000000))
        .quote("A", dec!(70000), dec!(60000))
        .quote("B", dec!(50000), dec!(40000));
    let mut ctl = controller(broker, &["A", "B"], 1);
    ctl.start().await.unwrap();

    ctl.tick(monday(9, 6, 0)).await.unwrap();
    ctl.tick(monday(9, 7, 0)).await.unwrap();

    let orders = ctl.broker().orders();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].code, "A");
    assert_eq!(ctl.bought().names(), ["A".to_string()]);

    let calls = ctl.broker().calls();
    assert!(!calls.iter().any(|c| c.ends_with(":B") || c.contains(":B:")));
}

#[tokio::test]
async fn bought_set_never_exceeds_limit() {
    let mut broker = FakeBroker::new(dec!(1000000));
    for code in ["A", "B", "C", "D"] {
        broker = broker.quote(code, dec!(10000), dec!(9000));
    }
    let mut ctl = controller(broker, &["A", "B", "C", "D"], 2);
    ctl.start().await.unwrap();

    for minute in 5..15 {
        ctl.tick(monday(9, minute, 0)).await.unwrap();
        assert!(ctl.bought().len() <= 2);
    }
    assert_eq!(ctl.bought().len(), 2);
    assert_eq!(ctl.broker().orders().len(), 2);
}

#[tokio::test]
async fn held_names_count_against_the_daily_limit() {
    let broker = FakeBroker::new(dec!(1000000))
        .holding("A", 5)
        .quote("B", dec!(10000), dec!(9000));
    let mut ctl = controller(broker, &["A", "B"], 1);
    ctl.start().await.unwrap();
    assert!(ctl.bought().contains("A"));

    // started mid-session: no cleanup, and the slot is taken
    ctl.tick(monday(11, 0, 0)).await.unwrap();
    assert!(ctl.broker().orders().is_empty());
}

#[tokio::test]
async fn cleanup_liquidates_once_per_window() {
    let broker = FakeBroker::new(dec!(1000000)).holding("A", 5).holding("B", 2);
    let mut ctl = controller(broker, &["C"], 3);
    ctl.start().await.unwrap();
    assert_eq!(ctl.bought().len(), 2);

    assert_eq!(ctl.tick(monday(9, 0, 30)).await.unwrap(), Tick::Continue(DayPhase::Cleanup));
    ctl.tick(monday(9, 2, 0)).await.unwrap();
    let sent_again = ctl.liquidate(monday(9, 3, 0).date(), LiquidationWindow::Cleanup).await.unwrap();

    assert_eq!(sent_again, 0);
    let orders = ctl.broker().orders();
    assert_eq!(orders.len(), 2);
    assert!(orders.iter().all(|o| o.side == OrderSide::Sell));
    assert!(orders.contains(&SubmittedOrder { code: "A".into(), quantity: 5, side: OrderSide::Sell }));
    assert!(ctl.bought().is_empty());
    assert!(ctl.ledger().is_empty());
}

#[tokio::test]
async fn close_window_sells_what_was_bought() {
    let broker = FakeBroker::new(dec!(1000000)).quote("A", dec!(70000), dec!(60000));
    let mut ctl = controller(broker, &["A"], 3);
    ctl.start().await.unwrap();

    ctl.tick(monday(9, 0, 10)).await.unwrap(); // cleanup, nothing held
    ctl.tick(monday(10, 0, 0)).await.unwrap(); // buys 4
    assert_eq!(ctl.broker().held("A"), 4);

    assert_eq!(ctl.tick(monday(15, 15, 0)).await.unwrap(), Tick::Continue(DayPhase::Liquidate));
    ctl.tick(monday(15, 16, 0)).await.unwrap();
    ctl.tick(monday(15, 19, 59)).await.unwrap();

    let sells: Vec<_> = ctl.broker().orders().into_iter().filter(|o| o.side == OrderSide::Sell).collect();
    assert_eq!(sells, vec![SubmittedOrder { code: "A".into(), quantity: 4, side: OrderSide::Sell }]);
    assert_eq!(ctl.broker().held("A"), 0);
    assert!(ctl.bought().is_empty());
}

#[tokio::test]
async fn liquidation_guard_resets_on_a_new_day() {
    let broker = FakeBroker::new(dec!(1000000)).holding("A", 1);
    let mut ctl = controller(broker, &["Z"], 3);
    ctl.start().await.unwrap();

    ctl.tick(monday(9, 1, 0)).await.unwrap();
    assert_eq!(ctl.broker().orders().len(), 1);

    // position reappears overnight (e.g. a late fill), Tuesday cleanup must run again
    ctl.broker().holdings.lock().unwrap().insert("A".into(), 2);
    ctl.tick(day(26, 9, 1, 0)).await.unwrap();
    assert_eq!(ctl.broker().orders().len(), 2);
}

#[tokio::test]
async fn rejected_buy_is_reported_and_skipped() {
    let broker = FakeBroker::new(dec!(1000000))
        .quote("A", dec!(70000), dec!(60000))
        .rejecting("A");
    let mut ctl = controller(broker, &["A"], 3);
    ctl.start().await.unwrap();

    assert!(ctl.tick(monday(10, 0, 0)).await.is_ok());
    assert!(ctl.bought().is_empty());
    assert!(ctl.notifier().contains("[BUY FAILED]"));
}

#[tokio::test]
async fn upstream_failure_ends_the_tick_with_an_error() {
    let broker = FakeBroker::new(dec!(1000000))
        .quote("A", dec!(70000), dec!(60000))
        .failing_range("A");
    let mut ctl = controller(broker, &["A"], 3);
    ctl.start().await.unwrap();

    let err = ctl.tick(monday(10, 0, 0)).await.unwrap_err();
    assert!(format!("{:#}", err).contains("timed out"));
    assert!(ctl.broker().orders().is_empty());
}

#[tokio::test]
async fn half_hourly_report_fires_once_per_hour() {
    let broker = FakeBroker::new(dec!(1000000)).quote("A", dec!(100), dec!(200));
    let mut ctl = controller(broker, &["A"], 3);
    ctl.start().await.unwrap();
    let balance_calls = |ctl: &volatility_breakout_trader::TradingController<FakeBroker, common::RecordingNotifier>| {
        ctl.broker().calls().iter().filter(|c| *c == "balance").count()
    };
    let before = balance_calls(&ctl);

    ctl.tick(monday(10, 29, 59)).await.unwrap();
    assert_eq!(balance_calls(&ctl), before);
    ctl.tick(monday(10, 30, 1)).await.unwrap();
    ctl.tick(monday(10, 30, 4)).await.unwrap();
    assert_eq!(balance_calls(&ctl), before + 1);
    ctl.tick(monday(10, 30, 6)).await.unwrap();
    ctl.tick(monday(11, 30, 0)).await.unwrap();
    assert_eq!(balance_calls(&ctl), before + 2);
}

#[tokio::test]
async fn full_day_runs_to_market_close() {
    let broker = FakeBroker::new(dec!(1000000))
        .holding("OLD", 7)
        .quote("A", dec!(70000), dec!(60000))
        .quote("B", dec!(50000), dec!(60000));
    let mut ctl = controller(broker, &["A", "B"], 3);
    let clock = ScriptedClock::new(vec![
        monday(8, 50, 0),
        monday(9, 0, 5),
        monday(9, 10, 0),
        monday(12, 0, 0),
        monday(15, 16, 0),
        monday(15, 21, 0),
    ]);

    let reason = ctl.run(&clock).await.unwrap();

    assert_eq!(reason, StopReason::MarketClosed);
    let orders = ctl.broker().orders();
    assert_eq!(
        orders,
        vec![
            SubmittedOrder { code: "OLD".into(), quantity: 7, side: OrderSide::Sell },
            SubmittedOrder { code: "A".into(), quantity: 4, side: OrderSide::Buy },
            SubmittedOrder { code: "A".into(), quantity: 4, side: OrderSide::Sell },
        ]
    );
    assert!(ctl.notifier().contains("starting"));
    assert!(ctl.notifier().contains("target reached"));
}
