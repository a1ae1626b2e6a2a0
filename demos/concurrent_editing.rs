//! Advanced concurrent editing example demonstrating the tree RGA store
//! under real multi-threaded load.
//!
//! `RgaStore` takes `&self` for every mutation (`crossbeam-skiplist` and
//! `parking_lot` locks carry the actual synchronization), so many OS
//! threads can share one `Arc<RgaStore>` and insert/delete concurrently
//! without any external locking. Each thread plays the part of a distinct
//! replica/client and generates its own monotonically increasing `OpId`s.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use rga_sync::crdt::types::{ClientId, OpId};
use rga_sync::crdt::{HEAD, RgaStore};

fn client_for(tag: usize) -> ClientId {
    ClientId::from_raw(format!("R{tag:03}"))
}

fn main() {
    println!("=== Advanced Concurrent RGA Store Example ===\n");

    basic_concurrent_demo();
    println!();

    stress_test_demo();
    println!();

    performance_comparison_demo();
    println!();

    conflict_resolution_demo();
}

/// Several threads insert and occasionally delete against one shared store.
fn basic_concurrent_demo() {
    println!("--- Basic Concurrent Operations ---");

    let num_threads = 4;
    let operations_per_thread = 100;
    let store = Arc::new(RgaStore::new());
    let mut handles = Vec::new();

    println!("Starting {num_threads} threads, each performing {operations_per_thread} operations");

    let start_time = Instant::now();

    for thread_id in 0..num_threads {
        let store = Arc::clone(&store);

        let handle = thread::spawn(move || {
            let thread_start = Instant::now();
            let client = client_for(thread_id);
            let mut last_id = HEAD.clone();
            let mut counter = 0u64;
            let mut operations_completed = 0;

            for i in 0..operations_per_thread {
                let ch = (b'A' + (thread_id * 4 + i % 26) as u8) as char;
                counter += 1;
                let id = OpId::new(counter, client.clone());
                store.apply_insert(last_id.clone(), id.clone(), ch);
                last_id = id;
                operations_completed += 1;

                if i % 10 == 0 && i > 0 {
                    store.apply_delete(last_id.clone());
                }
            }

            println!("Thread {thread_id} completed {operations_completed} operations in {:?}", thread_start.elapsed());
            operations_completed
        });

        handles.push(handle);
    }

    let mut total_operations = 0;
    for handle in handles {
        total_operations += handle.join().unwrap();
    }

    let total_time = start_time.elapsed();

    println!("All threads completed!");
    println!("Total operations: {total_operations}");
    println!("Total time: {total_time:?}");
    println!("Operations per second: {:.2}", total_operations as f64 / total_time.as_secs_f64());
    println!("Final document length: {}", store.render().len());
    println!("Total nodes (including tombstones): {}", store.node_count());
}

/// Eight replicas each insert independently in their own threads, then every
/// operation is replicated to every other replica and convergence is
/// verified.
fn stress_test_demo() {
    println!("--- Stress Test: Multiple Replicas ---");

    let num_replicas = 8;
    let operations_per_replica = 200;
    let stores: Vec<Arc<RgaStore>> = (0..num_replicas).map(|_| Arc::new(RgaStore::new())).collect();
    let mut handles = Vec::new();

    println!("Creating {num_replicas} replicas, each performing {operations_per_replica} operations");

    let start_time = Instant::now();
    let total_ops = Arc::new(AtomicUsize::new(0));

    for (replica_idx, store) in stores.iter().enumerate() {
        let store = Arc::clone(store);
        let ops_counter = Arc::clone(&total_ops);

        let handle = thread::spawn(move || {
            let client = client_for(replica_idx);
            let mut last_id = HEAD.clone();
            let mut counter = 0u64;
            let mut local_ops = 0;

            for i in 0..operations_per_replica {
                let ch = match i % 5 {
                    0 => (b'A' + replica_idx as u8) as char,
                    1 => (b'a' + replica_idx as u8) as char,
                    2 => (b'0' + replica_idx as u8) as char,
                    3 => ' ',
                    _ => '.',
                };

                counter += 1;
                let id = OpId::new(counter, client.clone());
                store.apply_insert(last_id.clone(), id.clone(), ch);
                local_ops += 1;

                if i % 20 == 0 {
                    last_id = HEAD.clone();
                } else {
                    last_id = id;
                }

                if i % 15 == 0 {
                    store.apply_delete(last_id.clone());
                }
            }

            ops_counter.fetch_add(local_ops, Ordering::Relaxed);
            local_ops
        });

        handles.push(handle);
    }

    for handle in handles {
        handle.join().unwrap();
    }

    let operation_time = start_time.elapsed();
    let total_operations = total_ops.load(Ordering::Relaxed);

    println!("Phase 1 - Concurrent Operations completed in {operation_time:?}");
    println!("Total operations: {total_operations}");

    println!("\nPhase 2 - Full mesh replication...");
    let sync_start = Instant::now();

    let mut all_records = Vec::new();
    for store in &stores {
        all_records.extend(store.to_snapshot().nodes);
    }
    println!("Collected {} total operations", all_records.len());

    for store in &stores {
        for record in &all_records {
            store.apply_insert(record.after.clone(), record.id.clone(), record.text);
            if record.deleted {
                store.apply_delete(record.id.clone());
            }
        }
    }

    let sync_time = sync_start.elapsed();

    let reference_content = stores[0].render();
    let mut all_converged = true;
    for (i, store) in stores.iter().enumerate() {
        if store.render() != reference_content {
            println!("ERROR: Replica {i} did not converge!");
            all_converged = false;
        }
    }

    if all_converged {
        println!("All {num_replicas} replicas successfully converged!");
    }

    println!("Synchronization completed in {sync_time:?}");
    println!("Final document length: {}", reference_content.len());
    println!("Total nodes across all replicas: {}", stores[0].node_count());
    println!("Operations per second: {:.2}", total_operations as f64 / operation_time.as_secs_f64());
    println!("Sync throughput: {:.2} ops/sec", all_records.len() as f64 / sync_time.as_secs_f64());
}

/// Compares the throughput of a single sequential inserter against the same
/// number of inserts spread across four concurrently-writing threads.
fn performance_comparison_demo() {
    println!("--- Performance Comparison ---");

    let operations = 1000u64;

    println!("Testing sequential operations...");
    let sequential_start = Instant::now();
    let store_seq = RgaStore::new();
    let client = client_for(0);
    let mut last_id = HEAD.clone();

    for i in 0..operations {
        let ch = (b'A' + (i % 26) as u8) as char;
        let id = OpId::new(i + 1, client.clone());
        store_seq.apply_insert(last_id.clone(), id.clone(), ch);
        last_id = id;
    }

    let sequential_time = sequential_start.elapsed();
    println!(
        "Sequential: {operations} ops in {sequential_time:?} ({:.2} ops/sec)",
        operations as f64 / sequential_time.as_secs_f64()
    );

    println!("Testing concurrent operations...");
    let concurrent_start = Instant::now();
    let store_conc = Arc::new(RgaStore::new());
    let threads = 4u64;
    let ops_per_thread = operations / threads;
    let mut handles = Vec::new();

    for thread_id in 0..threads {
        let store = Arc::clone(&store_conc);

        let handle = thread::spawn(move || {
            let client = client_for(thread_id as usize);
            let mut last_id = HEAD.clone();

            for i in 0..ops_per_thread {
                let ch = (b'A' + ((thread_id * ops_per_thread + i) % 26) as u8) as char;
                let id = OpId::new(i + 1, client.clone());
                store.apply_insert(last_id.clone(), id.clone(), ch);
                last_id = id;
            }
        });

        handles.push(handle);
    }

    for handle in handles {
        handle.join().unwrap();
    }

    let concurrent_time = concurrent_start.elapsed();
    println!(
        "Concurrent: {operations} ops in {concurrent_time:?} ({:.2} ops/sec)",
        operations as f64 / concurrent_time.as_secs_f64()
    );

    let speedup = sequential_time.as_secs_f64() / concurrent_time.as_secs_f64();
    println!("Concurrent speedup: {speedup:.2}x");

    println!("Sequential result length: {}", store_seq.render().len());
    println!("Concurrent result length: {}", store_conc.render().len());
}

/// Six replicas race to insert at the same position (right after `HEAD`)
/// from real threads with no coordination, then full replication verifies
/// the descending `OpId` tie-break gives every replica the same order.
fn conflict_resolution_demo() {
    println!("--- Advanced Conflict Resolution ---");

    let num_replicas = 6;
    let stores: Vec<Arc<RgaStore>> = (0..num_replicas).map(|_| Arc::new(RgaStore::new())).collect();

    println!("Testing conflict resolution with {num_replicas} replicas");
    println!("All replicas inserting at the same position...");
    let mut handles = Vec::new();

    for (replica_idx, store) in stores.iter().enumerate() {
        let store = Arc::clone(store);

        let handle = thread::spawn(move || {
            let client = client_for(replica_idx);
            let ch = (b'A' + replica_idx as u8) as char;

            for i in 0..50u64 {
                let id = OpId::new(i + 1, client.clone());
                store.apply_insert(HEAD.clone(), id, ch);

                if i % 10 == 0 {
                    thread::sleep(Duration::from_nanos(100));
                }
            }
        });

        handles.push(handle);
    }

    for handle in handles {
        handle.join().unwrap();
    }

    println!("Concurrent insertions completed. Starting replication...");

    let mut all_records = Vec::new();
    for store in &stores {
        all_records.extend(store.to_snapshot().nodes);
    }
    for store in &stores {
        for record in &all_records {
            store.apply_insert(record.after.clone(), record.id.clone(), record.text);
        }
    }

    let reference_content = stores[0].render();
    let reference_count = stores[0].node_count();

    println!("Verifying deterministic conflict resolution...");
    let mut all_identical = true;

    for (i, store) in stores.iter().enumerate() {
        let content = store.render();
        let count = store.node_count();

        if content != reference_content || count != reference_count {
            println!("ERROR: Replica {i} has different state!");
            println!("  Content: '{content}'");
            println!("  Nodes: {count}");
            all_identical = false;
        }
    }

    if all_identical {
        println!("Perfect conflict resolution! All replicas have identical state.");
        println!("Final content length: {}", reference_content.len());
        println!("Total nodes: {reference_count}");

        let sample_chars: String = reference_content.chars().take(20).collect();
        println!("\nDeterministic ordering sample:");
        println!("First 20 characters: '{sample_chars}'");

        let mut char_counts: HashMap<char, usize> = HashMap::new();
        for ch in reference_content.chars() {
            *char_counts.entry(ch).or_insert(0) += 1;
        }

        println!("Character distribution:");
        for (ch, count) in &char_counts {
            println!("  '{ch}': {count} occurrences");
        }
    } else {
        println!("Conflict resolution failed - replicas have different states");
    }
}
