/// Generate minibatch intervals
/// * `ntot` - number of total samples
/// * `batch_size` - the size of each batch
pub fn generate_minibatch_intervals(ntot: usize, batch_size: usize) -> Vec<(usize, usize)> {
    let batch_size = batch_size.max(1);
    let num_batches = ntot.div_ceil(batch_size);
    (0..num_batches)
        .map(|b| {
            let lb: usize = b * batch_size;
            let ub: usize = ((b + 1) * batch_size).min(ntot);
            (lb, ub)
        })
        .collect::<Vec<_>>()
}

/// Count occurrences of each index in `0..nbins`
/// * `indexes` - sampled indexes, each must be `< nbins`
/// * `nbins` - number of bins
pub fn bincount(indexes: &[usize], nbins: usize) -> anyhow::Result<Vec<usize>> {
    let mut counts = vec![0_usize; nbins];
    for &i in indexes {
        let c = counts
            .get_mut(i)
            .ok_or_else(|| anyhow::anyhow!("index {} out of range (nbins = {})", i, nbins))?;
        *c += 1;
    }
    Ok(counts)
}

/// Distinct indexes in ascending order with their multiplicities
/// * `indexes` - sampled indexes, each must be `< nbins`
/// * `nbins` - number of possible values
pub fn unique_with_counts(
    indexes: &[usize],
    nbins: usize,
) -> anyhow::Result<(Vec<usize>, Vec<usize>)> {
    let (unique, counts) = bincount(indexes, nbins)?
        .into_iter()
        .enumerate()
        .filter(|&(_, c)| c > 0)
        .unzip();
    Ok((unique, counts))
}
