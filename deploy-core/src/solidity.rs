//! Definitions of the Solidity interfaces called by the workflows

use alloy_sol_types::sol;

sol! {
    interface IERC20 {
        function totalSupply() external view returns (uint256);
        function approve(address spender, uint256 value) external returns (bool);
    }

    interface IUniswapV2Router02 {
        function addLiquidityETH(
            address token,
            uint256 amountTokenDesired,
            uint256 amountTokenMin,
            uint256 amountETHMin,
            address to,
            uint256 deadline
        ) external payable returns (uint256 amountToken, uint256 amountETH, uint256 liquidity);
    }
}
